pub mod artifacts;
pub mod artist;
pub mod client;
pub mod designer;
pub mod observer;
pub mod planner;
pub mod workflow;

#[cfg(test)]
pub mod testing;
