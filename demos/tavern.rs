/// Tavern example: a short interactive scene driven by host state.
///
/// Coins are read through value callbacks, spent through actions, and a
/// predicate hides the ale option once the purse is empty.
///
/// Run with: cargo run --example tavern
/// Autoplay with a fixed seed: cargo run --example tavern -- --auto 7

use narrative_script::{CompileOptions, Compiler, Reader, ReaderError, Script, Step};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::Cell;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

fn build_script(coins: &Rc<Cell<u32>>, drinks: &Rc<Cell<u32>>) -> Script {
    let (c_show, c_gate, c_spend, c_out) = (
        Rc::clone(coins),
        Rc::clone(coins),
        Rc::clone(coins),
        Rc::clone(coins),
    );
    let (d_show, d_drink) = (Rc::clone(drinks), Rc::clone(drinks));

    Script::new()
        .text("== Bar ==\n// the barkeep greets every visit\nThe barkeep nods. You have ")
        .value(move || c_show.get())
        .text(" coins and have had ")
        .value(move || d_show.get())
        .text(" drinks.\n> Buy an ale ")
        .predicate(move || c_gate.get() > 0)
        .text("\n\tYou slide a coin across the counter.")
        .action(move || {
            c_spend.set(c_spend.get().saturating_sub(1));
            d_drink.set(d_drink.get() + 1);
        })
        .text("\n\t-> Bar\n> Ask about rumours\n\t-> Rumours\n> Leave\n\tYou step into the night.\n\t<-\n")
        .text("== Rumours ==\nThey say the cellar is haunted.\nOut of coins? Then go home.")
        .predicate(move || c_out.get() == 0)
        .text("\n-> Bar\n")
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();
    let seed = match args.iter().position(|a| a == "--auto") {
        Some(i) => Some(
            args.get(i + 1)
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(42),
        ),
        None => None,
    };

    let coins = Rc::new(Cell::new(3));
    let drinks = Rc::new(Cell::new(0));
    let script = build_script(&coins, &drinks);

    let compiler = Compiler::with_options(CompileOptions::default().strip_comments(false));
    let document = Rc::new(compiler.compile(&script, |issue| eprintln!("{}", issue)));
    println!("Passages: {:?}\n", document.passage_names());

    let mut rng = seed.map(StdRng::seed_from_u64);
    let mut reader = Reader::new(Rc::clone(&document)).read_comments(true);
    let stdin = io::stdin();
    let mut input = stdin.lock().lines();

    // Upper bound for autoplay; interactive sessions end when the reader does.
    let mut turns = 0;
    loop {
        match reader.move_next() {
            Ok(true) => {}
            Ok(false) => break,
            Err(ReaderError::UnresolvedGoTo(target)) => {
                eprintln!("warning: jump to unknown passage '{}'", target);
                continue;
            }
            Err(e) => panic!("reader failed: {}", e),
        }

        let step = reader.current().cloned().expect("move_next produced a step");
        match &step {
            Step::Line(text) => println!("{}", text),
            Step::Comment(text) => println!("  ({})", text),
            Step::Choices(options) => {
                for (i, option) in options.iter().enumerate() {
                    println!("  {}. {}", i + 1, option);
                }
                let pick = match rng.as_mut() {
                    Some(rng) => {
                        turns += 1;
                        if turns > 50 {
                            break;
                        }
                        let pick = rng.gen_range(0..options.len());
                        println!("> {}", pick + 1);
                        pick
                    }
                    None => loop {
                        print!("> ");
                        io::stdout().flush().expect("Failed to flush stdout");
                        let line = match input.next() {
                            Some(line) => line.expect("Failed to read stdin"),
                            None => return,
                        };
                        match line.trim().parse::<usize>() {
                            Ok(n) if n >= 1 && n <= options.len() => break n - 1,
                            _ => println!("Pick a number between 1 and {}.", options.len()),
                        }
                    },
                };
                reader.choose(pick).expect("choice index was validated");
                println!();
            }
        }
    }

    println!("\nYou leave with {} coins after {} drinks.", coins.get(), drinks.get());
}
