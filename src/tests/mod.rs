// Test modules for Offstage
// Each module covers one slice of the module close path

mod helpers;
