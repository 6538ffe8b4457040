fn main() {
    if let Err(e) = flowstore_codegen::Builder::new().source_dir("src").compile() {
        panic!("{e}");
    }
}
