fn main() {
    canopy_pipeline::cli::run();
}
