//! Integration test harness.

mod pipeline_run;
