//! Build automation for hcp-kube
//!
//! Usage: cargo xtask <command>

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use xshell::{cmd, Shell};

const BINARY: &str = "hcp-kube";
const CRD_PATH: &str = "deploy/crd.yaml";

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation for hcp-kube")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the operator binary
    Build {
        #[arg(long)]
        release: bool,
    },
    /// Run tests
    Test {
        /// Run only the reconcile integration tests
        #[arg(long)]
        integration: bool,
    },
    /// Regenerate the HostedCluster CRD manifest
    Crd {
        /// Fail if the checked-in manifest is out of date instead of writing it
        #[arg(long)]
        check: bool,
    },
    /// Create a release tarball
    Dist {
        /// Target triple (e.g., x86_64-unknown-linux-gnu)
        #[arg(long)]
        target: Option<String>,
    },
    /// Run CI checks (format, clippy, test)
    Ci,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    sh.change_dir(project_root()?);

    match cli.command {
        Commands::Build { release } => build(&sh, release),
        Commands::Test { integration } => test(&sh, integration),
        Commands::Crd { check } => crd(&sh, check),
        Commands::Dist { target } => dist(&sh, target),
        Commands::Ci => ci(&sh),
    }
}

fn build(sh: &Shell, release: bool) -> Result<()> {
    println!("🔨 Building {}...", BINARY);

    if release {
        cmd!(sh, "cargo build --release --bin {BINARY}").run()?;
    } else {
        cmd!(sh, "cargo build --bin {BINARY}").run()?;
    }

    println!("✅ Build completed");
    Ok(())
}

fn test(sh: &Shell, integration: bool) -> Result<()> {
    println!("🧪 Running tests...");

    if integration {
        cmd!(sh, "cargo test --test '*'").run()?;
    } else {
        cmd!(sh, "cargo test --workspace").run()?;
    }

    println!("✅ All tests passed");
    Ok(())
}

fn crd(sh: &Shell, check: bool) -> Result<()> {
    let generated = cmd!(sh, "cargo run --quiet --bin {BINARY} -- crd")
        .read()
        .context("Failed to generate CRD")?;
    let path = project_root()?.join(CRD_PATH);

    if check {
        if !path.exists() {
            anyhow::bail!("{} not found, run `cargo xtask crd`", CRD_PATH);
        }
        let current = sh.read_file(&path)?;
        if current.trim_end() != generated.trim_end() {
            anyhow::bail!("{} is out of date, run `cargo xtask crd`", CRD_PATH);
        }
        println!("✅ {} is up to date", CRD_PATH);
    } else {
        sh.write_file(&path, format!("{}\n", generated.trim_end()))?;
        println!("✅ Wrote {}", CRD_PATH);
    }
    Ok(())
}

fn dist(sh: &Shell, target: Option<String>) -> Result<()> {
    println!("📦 Creating distribution package...");

    let binary_src = match target.as_deref() {
        Some(triple) => {
            cmd!(sh, "cargo build --release --bin {BINARY} --target {triple}").run()?;
            project_root()?.join(format!("target/{}/release/{}", triple, BINARY))
        }
        None => {
            cmd!(sh, "cargo build --release --bin {BINARY}").run()?;
            project_root()?.join(format!("target/release/{}", BINARY))
        }
    };

    let dist_dir = project_root()?.join("dist");
    sh.create_dir(&dist_dir)?;
    sh.copy_file(&binary_src, dist_dir.join(BINARY))?;
    crd(sh, false)?;
    sh.copy_file(project_root()?.join(CRD_PATH), dist_dir.join("crd.yaml"))?;

    let version = env!("CARGO_PKG_VERSION");
    let archive_name = match target.as_deref() {
        Some(triple) => format!("{}-{}-{}.tar.gz", BINARY, version, triple),
        None => format!("{}-{}.tar.gz", BINARY, version),
    };

    cmd!(sh, "tar -czf {archive_name} -C dist {BINARY} crd.yaml")
        .run()
        .context("Failed to create tarball")?;

    println!("✅ Distribution package created: {}", archive_name);
    Ok(())
}

fn ci(sh: &Shell) -> Result<()> {
    println!("🔍 Running CI checks...");

    cmd!(sh, "cargo fmt --all -- --check").run()?;
    cmd!(sh, "cargo clippy --all-targets --all-features -- -D warnings").run()?;
    test(sh, false)?;

    println!("\n✅ All CI checks passed!");
    Ok(())
}

fn project_root() -> Result<PathBuf> {
    Path::new(&env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(1)
        .map(Path::to_path_buf)
        .context("xtask must live one level below the workspace root")
}
