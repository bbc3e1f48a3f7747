use bookclub_db::migrations;

use crate::commands::{build_runtime, connect, load_config, CommandResult, StepFailure};

pub fn run() -> CommandResult {
    let config = match load_config("migrate") {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime("migrate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect(&config).await?;
        let applied = migrations::run_pending(&pool).await;
        pool.close().await;
        applied.map_err(|error| ("migration", error.to_string(), 5u8))?;
        Ok::<(), StepFailure>(())
    });

    match result {
        Ok(()) => CommandResult::success("migrate", "applied pending migrations"),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
