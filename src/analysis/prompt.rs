// Prompt text sent to the completion model.

use crate::types::Candle;

pub const SYSTEM_PROMPT: &str = "You are a financial trading analyst.";

const PROMPT_HEADER: &str = "Can you analyse the data and find some swing trading opportunity if available to make 5-10% profit?\n\
Note: it is Indian stock market. All prices are in rupees.";

/// Layout of candle timestamps in the prompt, e.g. `2024-01-02 09:15:00+05:30`.
const CANDLE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

pub fn format_candle(c: &Candle) -> String {
    format!(
        "{}: Open={}, High={}, Low={}, Close={}",
        c.date.format(CANDLE_DATE_FORMAT),
        c.open,
        c.high,
        c.low,
        c.close
    )
}

/// One line per candle, in the order given.
pub fn format_candles(candles: &[Candle]) -> String {
    candles
        .iter()
        .map(format_candle)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(candles: &[Candle]) -> String {
    format!("{PROMPT_HEADER}\n\n{}\n", format_candles(candles))
}
