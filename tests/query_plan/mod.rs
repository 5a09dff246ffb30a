mod build_execution_plan;
mod caching_query_planner;
mod operation_tests;
