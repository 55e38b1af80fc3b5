pub mod diagnosis;
pub mod record;
pub mod time_branch;
