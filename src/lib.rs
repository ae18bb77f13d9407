pub mod config;
pub mod emu;
pub mod engine;
pub mod error;
pub mod os;
pub mod queue;
pub mod sim;

#[cfg(test)]
mod test;
