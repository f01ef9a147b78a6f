fn main() {
    // Emit ESP-IDF link/search directives only when building the firmware
    // image; host lib/test builds have no sysenv to propagate.
    if std::env::var_os("CARGO_FEATURE_ESPIDF").is_some() {
        embuild::espidf::sysenv::output();
    }
}
