//! The nvidia-smi telemetry query: command construction and output parsing.

use std::time::Duration;

use crate::error::PollError;
use crate::session::Session;
use crate::types::GpuReading;

const BASE_FIELDS: &str = "utilization.gpu,memory.used,memory.total";
const FAULT_FIELD: &str = "reset_status.reset_required";
const FIELD_SEPARATOR: &str = ", ";

/// Per-call deadline for the remote query.
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(8);

/// The fixed remote command. Output is CSV without header or units, one
/// line per GPU.
pub fn build_query_command(check_faults: bool) -> String {
    let fields = if check_faults {
        format!("{},{}", BASE_FIELDS, FAULT_FIELD)
    } else {
        BASE_FIELDS.to_string()
    };
    format!(
        "nvidia-smi --query-gpu={} --format=csv,noheader,nounits",
        fields
    )
}

/// Parse the query output. Any malformed line fails the whole poll.
pub fn parse_output(output: &str, check_faults: bool) -> Result<Vec<GpuReading>, PollError> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(index, line)| parse_line(index, line, check_faults))
        .collect()
}

fn parse_line(index: usize, line: &str, check_faults: bool) -> Result<GpuReading, PollError> {
    let fields: Vec<&str> = line.split(FIELD_SEPARATOR).map(str::trim).collect();

    let arity_ok = if check_faults {
        fields.len() == 4
    } else {
        fields.len() >= 3
    };
    if !arity_ok {
        return Err(PollError::Output(format!(
            "GPU {}: expected {} fields, got {} in '{}'",
            index,
            if check_faults { "4" } else { "at least 3" },
            fields.len(),
            line
        )));
    }

    let faulted = check_faults && fields[3] == "Yes";

    // A GPU that needs a reset reports placeholders like "[N/A]" instead of numbers.
    let number = |position: usize, name: &str| -> Result<u64, PollError> {
        match fields[position].parse::<u64>() {
            Ok(value) => Ok(value),
            Err(_) if faulted => Ok(0),
            Err(_) => Err(PollError::Output(format!(
                "GPU {}: {} is not a number: '{}'",
                index, name, fields[position]
            ))),
        }
    };

    let utilization = number(0, "utilization.gpu")?;
    let utilization_percent = u32::try_from(utilization).map_err(|_| {
        PollError::Output(format!("GPU {}: utilization out of range: {}", index, utilization))
    })?;

    Ok(GpuReading {
        index,
        utilization_percent,
        memory_used_mib: number(1, "memory.used")?,
        memory_total_mib: number(2, "memory.total")?,
        faulted,
    })
}

/// Run the query once over `session`, bounded by `timeout` whatever the
/// session does internally. Retrying is the caller's job.
pub async fn query_gpus(
    session: &mut dyn Session,
    check_faults: bool,
    timeout: Duration,
) -> Result<Vec<GpuReading>, PollError> {
    let command = build_query_command(check_faults);
    let output = match tokio::time::timeout(timeout, session.execute(&command, timeout)).await {
        Ok(result) => result?,
        Err(_) => return Err(PollError::Timeout(timeout)),
    };
    parse_output(&output, check_faults)
}
