pub mod falkordb;
