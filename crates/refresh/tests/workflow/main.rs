mod refresh_workflow;

// -----------------------------------------------------------------------------
