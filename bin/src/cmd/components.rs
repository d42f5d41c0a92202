//! Component listing command implementation.

use granary::features::available_components;
use granary::traits::WeightConfig;

/// List the risk components and their preset weights.
pub(crate) fn list_components(verbose: bool) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║                    Risk Components                           ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let three = WeightConfig::three_component();
    let four = WeightConfig::four_component();

    println!("{:<16} {:>8} {:>8}  {}", "Signal", "3-comp", "4-comp", "Optional");
    println!("{}", "-".repeat(60));
    for info in available_components() {
        println!(
            "{:<16} {:>8.3} {:>8.3}  {}",
            info.name,
            three.weight(info.component),
            four.weight(info.component),
            if info.optional { "yes" } else { "no" }
        );
        if verbose {
            println!("    {}", info.description);
            println!("    inputs: {}", info.inputs.join(", "));
        }
    }
    println!();

    if !verbose {
        println!("Use --verbose for inputs and descriptions.\n");
    }
}
