fn main() {
    gto_resolve::cli::run();
}
