//! Process runner tests.

mod execute_test;
