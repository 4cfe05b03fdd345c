use lgp_lib::program::Program;
use lgp_lib::symreg;
use std::{env, fs, process};

// Loads a champion saved by the main binary and re-scores it on the symbolic-regression
// test set.
fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() != 2 {
        eprintln!("Need to supply a champion JSON file to read in");
        process::exit(1);
    }

    let contents = fs::read_to_string(&args[1]).expect("Could not read file");
    let mut champion: Program = serde_json::from_str(&contents).expect("Could not parse champion");

    let mut test = symreg::test_environment(champion.register_count());
    champion
        .update_fitness(&mut test)
        .expect("Could not evaluate champion");

    println!("{}", champion.render(true, true));
    println!(
        "Test fitness over {} cases: {}",
        test.case_count(),
        champion.fitness()
    );
}
