//! Integration tests driving the shipline binary against real git repos

mod helpers;

mod test_attach;
mod test_plan;
mod test_run;
mod test_window;
