use mxbridge_codec::{decode, dispatch, encode};

use crate::cmd::{connect_with_timeout, parse_duration, RoundtripArgs};
use crate::exit::{codec_error, CliResult, SUCCESS};
use crate::output::{print_matrix, MatrixReport, OutputFormat};

pub fn run(args: RoundtripArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let array = args.matrix.to_array()?;
    let sent_as = dispatch(array.element_type()).value_type;

    let client = connect_with_timeout(&args.path, timeout)?;
    let handle = encode(&client, &array).map_err(|err| codec_error("encode failed", err))?;
    let matrix = decode(&client, handle).map_err(|err| codec_error("decode failed", err))?;
    if let Err(err) = client.release(handle) {
        tracing::warn!(%handle, error = %err, "release failed");
    }
    tracing::debug!(%handle, session_id = client.session_id(), "round trip complete");

    print_matrix(
        &MatrixReport {
            operation: "roundtrip",
            handle,
            sent_as,
            matrix: &matrix,
        },
        format,
    );
    Ok(SUCCESS)
}
