pub mod driver;

pub use driver::OperatorDriver;
