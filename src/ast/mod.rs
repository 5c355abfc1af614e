pub mod statement;
pub mod values;

pub use self::statement::{DeleteStatement, InsertStatement, Statement, StatementKind, TagStatement};
pub use self::values::Value;
