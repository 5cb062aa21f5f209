fn main() {
    riscv_regress::cli::run();
}
