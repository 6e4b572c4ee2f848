// Sea-ORM backend: plan translation and execution

pub mod executor;
pub mod statement;

pub use executor::SeaOrmExecutor;
pub use statement::{PlanStatements, PlanTranslator, json_to_value};
