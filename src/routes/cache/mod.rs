mod handler;
mod model;

pub use handler::{
    cancel_sweep, clear_all, clear_values, get_value, list_entries, populate, register,
    register_batch, resolve, sweep_status,
};
pub use model::{
    ClearResponse, GetValueResponse, KeyQuery, RegisterBatchRequest, RegisterBatchResponse,
    RegisterRequest, RegisterResponse, ResolveRequest, ResolveResponse,
};
