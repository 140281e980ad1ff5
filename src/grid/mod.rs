mod mapper;
mod position;

pub use mapper::{MAX_COLUMNS, PositionMapper, ROW_LETTERS, normalize_code};
pub use position::TimerPosition;
