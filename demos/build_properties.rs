use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    propforge::apps::run_property_build(std::env::args().skip(1))
}
