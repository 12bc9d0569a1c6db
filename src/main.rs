use clap::{Parser, Subcommand};
use dotenv::dotenv;
use human_panic::setup_panic;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, error, warn};

// 从 lib.rs 导入模块
use school_records::access::Actor;
use school_records::config::AppConfig;
use school_records::models::system::responses::BackendStatusResponse;
use school_records::models::{Collection, Role};
use school_records::runtime::lifetime;
use school_records::services::{BackupService, MigrationService, RelationshipRepair};

/// 学校档案后端维护工具
#[derive(Parser)]
#[command(name = "school-records")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 执行操作的管理员 id（写入审计记录）
    #[arg(global = true, long, default_value = "system")]
    actor: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 显示存储状态与各集合记录数
    Status,
    /// 将快照文件迁移到主存储（已有数据的集合跳过）
    Migrate,
    /// 创建全量备份
    Backup,
    /// 列出备份文件
    ListBackups,
    /// 从备份文件恢复（破坏性）
    Restore {
        /// 备份文件路径
        file: PathBuf,
    },
    /// 修复家长/学生引用并清理孤立的成绩与提交
    Repair,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    let cli = Cli::parse();

    let start_time = chrono::Utc::now();

    // 初始化配置
    setup_panic!();
    AppConfig::init()?;
    let config = AppConfig::get();

    // 初始化日志
    let stdout_log = std::io::stdout();
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(stdout_log);
    let filter = tracing_subscriber::EnvFilter::new(&config.app.log_level);
    let tracing_format = tracing_subscriber::fmt::format()
        .with_level(true)
        .with_ansi(true);

    let tracing_builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking_writer)
        .event_format(tracing_format);

    if config.is_development() {
        tracing_builder
            .with_file(true)
            .with_line_number(true)
            .init();
    } else {
        tracing_builder.json().init();
    }

    warn!(
        "Starting {} ({})
        Project: {}
        Version: {}",
        config.app.system_name,
        config.app.environment,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
    );

    let context = lifetime::startup::prepare_startup(config).await?;
    let router = context.router.clone();

    debug!(
        "Startup completed in {} ms",
        chrono::Utc::now()
            .signed_duration_since(start_time)
            .num_milliseconds()
    );

    let actor = Actor::new(cli.actor, Role::Admin);

    let task = async {
        match cli.command {
            Commands::Status => {
                let mut counts = BTreeMap::new();
                for collection in Collection::ALL {
                    match router.count(collection).await {
                        Ok(count) => {
                            counts.insert(collection, count);
                        }
                        Err(e) => error!("Failed to count {}: {}", collection, e),
                    }
                }
                print_json(&BackendStatusResponse {
                    state: router.state(),
                    primary_configured: router.primary().is_some(),
                    counts,
                })
            }
            Commands::Migrate => {
                if let Some(report) = &context.migration {
                    debug!("Startup already migrated {} record(s)", report.total_inserted());
                }
                let report = MigrationService::from_router(&router)?.migrate().await?;
                print_json(&report)
            }
            Commands::Backup => {
                let path = BackupService::new(router.clone(), &config.backup.dir)
                    .create_backup()
                    .await?;
                println!("{}", path.display());
                Ok(())
            }
            Commands::ListBackups => {
                let backups = BackupService::new(router.clone(), &config.backup.dir)
                    .list_backups()
                    .await?;
                for path in backups {
                    println!("{}", path.display());
                }
                Ok(())
            }
            Commands::Restore { file } => {
                let report = BackupService::new(router.clone(), &config.backup.dir)
                    .restore_backup_by(&actor, &file)
                    .await?;
                print_json(&report)?;
                report.into_result()?;
                Ok(())
            }
            Commands::Repair => {
                let report = RelationshipRepair::new(router.clone()).run().await?;
                print_json(&report)
            }
        }
    };

    tokio::select! {
        res = task => {
            res?;
        }
        res = lifetime::shutdown::listen_for_shutdown() => {
            res?;
            warn!("Interrupted before the command completed");
        }
    }

    Ok(())
}
