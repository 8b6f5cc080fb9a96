use fantasma_lending::processor::FantasmaLending;

fn main() {
    let schema = FantasmaLending::module_schema();
    println!("{}", schema.as_json().expect("Failed to generate schema"));
}
