use anyhow::Result;
use clap::{Parser, Subcommand};
use xshell::{Shell, cmd};

#[derive(Parser)]
#[command(name = "xtask", about = "VoidWarp 开发任务自动化")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 构建核心库 (release)
    Build,
    /// 运行测试
    Test {
        /// 显示日志输出
        #[arg(long)]
        nocapture: bool,
    },
    /// 运行 clippy 检查
    Lint,
    /// 运行测试并生成覆盖率报告
    Coverage,
    /// 生成 API 文档
    Doc {
        /// 生成后在浏览器中打开
        #[arg(long)]
        open: bool,
    },
    /// 清理构建产物
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let sh = Shell::new()?;

    // 确保在项目根目录执行
    let project_root = match std::env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => std::path::PathBuf::from(dir)
            .parent()
            .map(std::path::Path::to_path_buf)
            .unwrap_or_default(),
        Err(_) => std::env::current_dir()?,
    };
    sh.change_dir(&project_root);

    match cli.command {
        Commands::Build => build(&sh)?,
        Commands::Test { nocapture } => test(&sh, nocapture)?,
        Commands::Lint => lint(&sh)?,
        Commands::Coverage => coverage(&sh)?,
        Commands::Doc { open } => doc(&sh, open)?,
        Commands::Clean => clean(&sh)?,
    }

    Ok(())
}

fn build(sh: &Shell) -> Result<()> {
    println!("🔨 构建 voidwarp-core...");
    cmd!(sh, "cargo build --release -p voidwarp-core").run()?;
    println!("✅ 构建完成");
    Ok(())
}

fn test(sh: &Shell, nocapture: bool) -> Result<()> {
    println!("🧪 运行测试...");
    if nocapture {
        cmd!(sh, "cargo test --workspace -- --nocapture").run()?;
    } else {
        cmd!(sh, "cargo test --workspace").run()?;
    }
    println!("✅ 测试完成");
    Ok(())
}

fn lint(sh: &Shell) -> Result<()> {
    println!("🔍 运行 clippy...");
    cmd!(sh, "cargo clippy --workspace --all-targets -- -D warnings").run()?;
    println!("✅ 检查通过");
    Ok(())
}

fn coverage(sh: &Shell) -> Result<()> {
    println!("📊 运行测试覆盖率分析...");

    // 检查 cargo-tarpaulin 是否安装
    if cmd!(sh, "cargo tarpaulin --version").run().is_err() {
        println!("📦 安装 cargo-tarpaulin...");
        cmd!(sh, "cargo install cargo-tarpaulin").run()?;
    }

    println!("🔍 分析中...");
    cmd!(
        sh,
        "cargo tarpaulin --packages voidwarp-core --out Html --output-dir target/coverage"
    )
    .run()?;

    println!("✅ 覆盖率报告已生成");
    println!("   HTML 报告: target/coverage/tarpaulin-report.html");
    Ok(())
}

fn doc(sh: &Shell, open: bool) -> Result<()> {
    println!("📚 生成文档...");
    if open {
        cmd!(sh, "cargo doc -p voidwarp-core --no-deps --open").run()?;
    } else {
        cmd!(sh, "cargo doc -p voidwarp-core --no-deps").run()?;
    }
    println!("✅ 文档位于 target/doc/voidwarp_core/index.html");
    Ok(())
}

fn clean(sh: &Shell) -> Result<()> {
    println!("🧹 清理构建产物...");
    cmd!(sh, "cargo clean").run()?;
    println!("✅ 清理完成");
    Ok(())
}
