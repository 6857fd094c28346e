use ledger_batch_runner::batch::SubmitMutation;
use ledger_batch_runner::checkpoint::{CheckpointStore, FileCheckpointRepository};
use ledger_batch_runner::client::JsonRpcChainClient;
use ledger_batch_runner::config::{
	AggregationConfig, JobConfig, RunConfig, load_config, load_work_items, validate_work_items,
};
use ledger_batch_runner::error::RunError;
use ledger_batch_runner::runner::{RunSummary, Runner};
use ledger_batch_runner::scanner::{GroupByField, SumByField};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

const CONFIG_ERROR_EXIT: u8 = 2;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	let Some(config_path) = std::env::args().nth(1) else {
		error!("Usage: ledger-batch-runner <config.json>");
		return ExitCode::from(CONFIG_ERROR_EXIT);
	};

	let config = match load_config(&config_path) {
		Ok(config) => config,
		Err(e) => {
			error!("{}", e);
			return ExitCode::from(CONFIG_ERROR_EXIT);
		}
	};

	match run(config).await {
		Ok(summary) => {
			info!("{}", summary);
			ExitCode::from(summary.exit_code())
		}
		Err(e @ RunError::Config(_)) => {
			error!("{}", e);
			ExitCode::from(CONFIG_ERROR_EXIT)
		}
		Err(e) => {
			error!("Run aborted: {}", e);
			ExitCode::FAILURE
		}
	}
}

async fn run(config: RunConfig) -> Result<RunSummary, RunError> {
	info!("Connecting to {}", config.endpoint);
	let client = JsonRpcChainClient::new(config.endpoint.clone(), config.request_timeout())?;

	match config.job.clone() {
		JobConfig::Scan {
			from_block,
			to_block,
			aggregation,
		} => {
			let client = Arc::new(client);
			let mut runner = Runner::new(client, config);
			match aggregation {
				AggregationConfig::GroupBy {
					key_field,
					value_field,
				} => {
					let report = runner
						.run_scan(from_block, to_block, &GroupByField::new(key_field, value_field))
						.await?;
					for (key, values) in report.result.index.sorted() {
						let values: Vec<&str> = values.iter().map(String::as_str).collect();
						println!("{}\t{}", key, values.join(","));
					}
					Ok(report.summary)
				}
				AggregationConfig::SumBy {
					key_field,
					amount_field,
				} => {
					let report = runner
						.run_scan(from_block, to_block, &SumByField::new(key_field, amount_field))
						.await?;
					for (key, total) in report.result.index.sorted() {
						println!("{}\t{}", key, total);
					}
					Ok(report.summary)
				}
			}
		}
		JobConfig::Mutate {
			items_path,
			target,
			await_deployment,
			sender,
		} => {
			let items = load_work_items(&items_path)?;
			validate_work_items(&items)?;

			let confirmation = &config.confirmation;
			let client = Arc::new(
				client
					.with_sender(sender)
					.with_confirmation(confirmation.poll_interval(), confirmation.timeout()),
			);
			let retry = config.retry.policy();
			let repository = FileCheckpointRepository::new(config.checkpoint_path.clone().into());
			let mut store = CheckpointStore::open(Box::new(repository)).await?;
			let mutation = SubmitMutation::new(client.clone(), retry, target.clone());
			let mut runner = Runner::new(client, config);

			let await_target = target.as_deref().filter(|_| await_deployment);
			let report = runner
				.run_mutation_job(&items, &mut store, &mutation, await_target)
				.await?;
			for failure in report.outcome.failed() {
				println!("{}\t{}\t{}", failure.key, failure.error_kind, failure.message);
			}
			Ok(report.summary)
		}
	}
}
