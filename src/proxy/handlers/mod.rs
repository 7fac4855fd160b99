// Handlers module - request handlers

pub mod forward;
