fn main() {
    // No-op on host targets; exports ESP-IDF link/sysenv data when the
    // espidf toolchain environment is present.
    embuild::espidf::sysenv::output();
}
