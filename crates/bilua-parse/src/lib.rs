pub mod ast;
pub mod parser;
pub mod tokenizer;

pub use ast::{BinOp, Block, Chunk, Expr, ExprKind, Field, FunctionBody, Stat, StatKind, UnOp};
pub use parser::{ParseError, Parser, parse_chunk};
pub use tokenizer::{Token, TokenPayload, TokenType, Tokenizer, TokenizerError};
