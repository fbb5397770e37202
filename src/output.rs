//! Tagged status lines for the operator running the trigger.
//!
//! Informational and success lines go to stdout, warnings and errors to
//! stderr, each behind a fixed-width tag so deploy logs stay greppable.

use colored::Colorize;

pub fn info(msg: &str) {
    println!("{} {}", "[info]".cyan(), msg);
}

pub fn ok(msg: &str) {
    println!("{} {}", "[ ok ]".green(), msg);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "[warn]".yellow(), msg);
}

pub fn fail(msg: &str) {
    eprintln!("{} {}", "[fail]".red(), msg);
}
