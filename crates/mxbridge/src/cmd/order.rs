use mxbridge_codec::{decode, dispatch, encode, CodecError};

use crate::cmd::{connect_with_timeout, parse_duration, OrderArgs};
use crate::exit::{codec_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_matrix, MatrixReport, OutputFormat};

pub fn run(args: OrderArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    if args.by == 0 {
        return Err(CliError::new(USAGE, "--by is 1-based and must be at least 1"));
    }
    let array = args.matrix.to_array()?;
    let sent_as = dispatch(array.element_type()).value_type;

    let client = connect_with_timeout(&args.path, timeout)?;
    let source = encode(&client, &array).map_err(|err| codec_error("encode failed", err))?;
    let ordered = client
        .order(source, args.by, args.decreasing, args.index_return)
        .map_err(|err| codec_error("order failed", CodecError::from(err)))?;
    let matrix = decode(&client, ordered).map_err(|err| codec_error("decode failed", err))?;

    for handle in [source, ordered] {
        if let Err(err) = client.release(handle) {
            tracing::warn!(%handle, error = %err, "release failed");
        }
    }

    print_matrix(
        &MatrixReport {
            operation: "order",
            handle: ordered,
            sent_as,
            matrix: &matrix,
        },
        format,
    );
    Ok(SUCCESS)
}
