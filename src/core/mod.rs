// Core modules implementing the descriptor model, the three record walks, and errors.
pub mod de;
pub mod error;
pub mod options;
pub mod record;
pub mod release;
pub mod schema;
pub mod ser;
