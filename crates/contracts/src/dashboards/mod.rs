pub mod d402_logistics_statistics;
