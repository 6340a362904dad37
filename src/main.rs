fn main() -> std::process::ExitCode {
    freight_sentinel::run()
}
