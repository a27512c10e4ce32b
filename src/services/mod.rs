mod context;

pub use context::ServiceContext;
