use renderlink_client::opcode;

use crate::cmd::OpcodesArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_opcodes, OpcodeRow, OutputFormat};

pub fn run(_args: OpcodesArgs, format: OutputFormat) -> CliResult<i32> {
    let rows = catalog();
    print_opcodes(&rows, format);
    Ok(SUCCESS)
}

fn catalog() -> Vec<OpcodeRow> {
    [
        (opcode::HANDSHAKE, "both"),
        (opcode::HEARTBEAT, "both"),
        (opcode::SEND_IMAGE, "outbound"),
        (opcode::REQUEST_IMAGE, "outbound"),
        (opcode::QUEUE_PROMPT, "outbound"),
        (opcode::RESPONSED_IMAGE, "inbound"),
        (opcode::PROGRESS, "inbound"),
        (opcode::ERROR, "inbound"),
        (opcode::OK, "inbound"),
    ]
    .into_iter()
    .map(|(code, direction)| OpcodeRow {
        code,
        name: opcode::opcode_name(code),
        direction,
    })
    .collect()
}
