use backend::auth::hash_passphrase;
use std::{env, process};

/// Print a salted hash suitable for a LOGIN_<name> entry in the env file.
fn main() {
    let Some(phrase) = env::args().nth(1) else {
        eprintln!("usage: hash_passphrase <clear-text-passphrase>");
        process::exit(1);
    };
    println!("{}", hash_passphrase(&phrase));
}
