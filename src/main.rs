use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    streamchat::cli::main()
}
