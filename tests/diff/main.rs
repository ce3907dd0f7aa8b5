// Test entry point for diff tests
// Partitioning and parallel comparison tests are organized here
