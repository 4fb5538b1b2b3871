fn main() {
    carbide::compiler_main();
}
