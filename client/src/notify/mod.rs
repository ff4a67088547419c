pub mod bus_events;
pub mod listener;
pub mod object_events;
pub mod registry;
