//! CLI tool to print the contents of a built schema package
//!
//! Usage:
//!   cargo run --bin inspect-package -- ./Catalog/bin/Debug/netstandard2.0/Catalog.dacpac

use std::env;
use std::path::Path;

use dacpac_deployer::package::PackageLoader;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <path-to-package>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} ./Catalog/bin/Debug/netstandard2.0/Catalog.dacpac", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);

    if !path.is_file() {
        eprintln!("Error: Package does not exist: {}", path.display());
        std::process::exit(1);
    }

    let package = match PackageLoader::new().load_path(path) {
        Ok(package) => package,
        Err(e) => {
            eprintln!("Error loading package: {}", e);
            std::process::exit(1);
        }
    };

    let header = package.header();
    println!("Package:  {} {}", header.name, header.version);
    if let Some(description) = &header.description {
        println!("          {}", description);
    }
    println!("Checksum: {}", package.checksum());
    println!();

    let mut custom_data: Vec<_> = header.all_custom_data().iter().collect();
    custom_data.sort_by(|a, b| (a.category(), a.data_type()).cmp(&(b.category(), b.data_type())));

    println!("Custom data:");
    if custom_data.is_empty() {
        println!("  (none)");
    }
    for data in custom_data {
        println!("  [{} / {}]", data.category(), data.data_type());
        let mut items = data.items();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        for item in items {
            println!("    {} = {}", item.name, item.value);
        }
    }
    println!();

    println!("Deployment plan:");
    for (index, script) in package.deployment_plan(true, true).iter().enumerate() {
        println!(
            "  {:>3}. {:<40} {:?} ({} bytes)",
            index + 1,
            script.name,
            script.kind,
            script.sql.len()
        );
    }
}
