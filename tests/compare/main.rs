// Test entry point for comparison orchestration tests

mod orchestrator_tests;
