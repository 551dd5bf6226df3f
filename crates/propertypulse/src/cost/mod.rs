//! Renovation cost estimation.

pub mod engine;
pub mod region;
pub mod table;

pub use engine::{
    format_pounds, CostCategory, CostEngine, CostEstimate, CostItem, NoteLevel, OverallAssessment,
    PropertyInfo, PropertyProfile, RenovationScope, RoomCost, SummaryNote,
};
pub use region::Region;
pub use table::{default_room_size, CostRange, CostTable};
