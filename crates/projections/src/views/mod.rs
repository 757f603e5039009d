//! Dashboard views over the fulfillment event stream.

pub mod open_queries;
pub mod order_board;
pub mod stock_levels;

pub use open_queries::{OpenQueriesView, OpenQuery};
pub use order_board::{BoardSummary, EscalationEntry, OrderBoardView, OrderCard};
pub use stock_levels::{StockLevel, StockLevelsView};
