pub mod extract;
pub mod html;
pub mod sections;

pub use extract::detail::{invalid_cipid_record, parse_detail};
pub use sections::SectionLabels;
