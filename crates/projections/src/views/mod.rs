//! Read model views.

pub mod open_needs;
pub mod order_board;

pub use open_needs::{OpenNeedSummary, OpenNeedsView};
pub use order_board::{OrderBoardView, OrderSummary};
